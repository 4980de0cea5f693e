// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Codeport Core - Listing Review Workflow Engine
//!
//! This crate implements the request lifecycle behind the project listing
//! marketplace: accounts submit proposed changes (create, update or delete a
//! listing, or mirror code artifacts to the target network), reviewers
//! confirm or reject them, and confirmed artifact requests are handed to the
//! asynchronous publication worker in `codeport-publisher`.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    Marketplace Frontend                   │
//! └──────────────────────────────────────────────────────────┘
//!                │ submissions              │ review actions
//!                ▼                          ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │                codeport-core (this crate)                 │
//! │        RequestWorkflow: validate, claim, apply            │
//! └──────────────────────────────────────────────────────────┘
//!        │                                        │
//!        │ PostgreSQL / SQLite                    │ publication_jobs
//!        ▼                                        ▼
//! ┌───────────────────┐              ┌───────────────────────┐
//! │  Durable Storage  │◄─────────────│  codeport-publisher   │
//! │ (requests, jobs,  │              │  (polls, mirrors,     │
//! │  projects, links) │              │   retries, resolves)  │
//! └───────────────────┘              └───────────────────────┘
//! ```
//!
//! # Request State Machine
//!
//! ```text
//!                 ┌───────────┐
//!                 │ SUBMITTED │
//!                 └─────┬─────┘
//!                       │ confirm / reject claims the request
//!                       ▼
//!                 ┌────────────┐
//!        ┌────────│ PROCESSING │────────┐
//!        │        └─────┬──────┘        │
//!   approve             │ reject        │ publication failed
//!        ▼              ▼               ▼
//!  ┌──────────┐   ┌──────────┐     ┌───────┐
//!  │ APPROVED │   │ REJECTED │     │ ERROR │
//!  └──────────┘   └──────────┘     └───────┘
//! ```
//!
//! The claim is a conditional database update, so concurrent review actions
//! on the same request resolve to exactly one winner; the loser gets a
//! stable already-processed error.
//!
//! # Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `CODEPORT_DATABASE_URL` | Yes | - | PostgreSQL or SQLite connection string |
//! | `CODEPORT_ADMIN_EMAIL` | No | `listings@syncmyorders.io` | Review-queue recipient |
//! | `CODEPORT_LIST_PAGE_SIZE` | No | `50` | Max requests per listing page |
//!
//! # Modules
//!
//! - [`config`]: Configuration from environment variables
//! - [`error`]: Error types with stable review API error codes
//! - [`model`]: Domain enums, the sparse project patch and request payload
//! - [`notify`]: Outbound notification seam
//! - [`persistence`]: Persistence trait with PostgreSQL and SQLite backends
//! - [`workflow`]: The review request workflow engine

#![deny(missing_docs)]

/// Configuration loaded from environment variables.
pub mod config;

/// Error types with stable review API error codes.
pub mod error;

/// Domain model: statuses, categories, patches and payload snapshots.
pub mod model;

/// Outbound notification seam.
pub mod notify;

/// Persistence trait and database backends.
pub mod persistence;

/// The review request workflow engine.
pub mod workflow;
