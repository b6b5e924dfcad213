// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工作器模块
///
/// 同步周期编排，以及监管同步进程的看门狗循环
pub mod sync_orchestrator;
pub mod watchdog;

pub use sync_orchestrator::SyncOrchestrator;
pub use watchdog::{SyncSupervisor, Watchdog};
