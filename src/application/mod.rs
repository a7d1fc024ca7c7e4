// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod credential_vault;
pub mod orchestrator;
pub mod policy_engine;
pub mod token_service;
