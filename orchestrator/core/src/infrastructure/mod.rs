// Copyright (c) 2026 Ledgerline Contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod db;
pub mod event_bus;
pub mod repositories;

pub use db::Database;
pub use event_bus::{EventBus, EventBusError, EventReceiver, TenantEventReceiver};
