// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node type registries built on the core framework.

pub mod calculator;
