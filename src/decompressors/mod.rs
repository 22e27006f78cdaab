// SPDX-License-Identifier: LGPL-2.1

//! Decompressors for entropy-coded pixel payloads.

pub mod craw;
