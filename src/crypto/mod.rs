// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod canonical;
pub mod envelope;
pub mod keys;
pub mod signature;
