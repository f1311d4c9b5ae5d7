// zram-tune - Reconcile, save and apply zram swap settings
// SPDX-License-Identifier: GPL-3.0-or-later

pub mod backend;
pub mod config;
pub mod defaults;
pub mod detect;
pub mod dispatch;
pub mod helpers;
pub mod meminfo;
pub mod preset;
pub mod reconcile;
pub mod registry;
pub mod script;
pub mod session;
pub mod state;
pub mod tweak;
pub mod view;
pub mod zram;
