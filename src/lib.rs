// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # AEGIS Gateway
//!
//! Policy-enforcing reverse proxy that brokers outbound tool invocations
//! (search, HTTP fetch, LLM chat, email send) on behalf of programmatic agents.
//!
//! The crate is organized in the same hexagonal layering the orchestrator core
//! uses: `domain` (pure types and invariants), `application` (use-case services
//! orchestrating domain + repository traits), `infrastructure` (concrete
//! adapters: in-memory repositories, resilience fabric, upstream tool
//! adapters, observability), and `presentation` (the HTTP entry point).

pub mod config;
pub mod error;

pub mod domain;
pub mod crypto;
pub mod application;
pub mod infrastructure;
pub mod presentation;
