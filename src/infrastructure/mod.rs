// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod adapters;
pub mod chaos;
pub mod observability;
pub mod repositories;
pub mod resilience;
