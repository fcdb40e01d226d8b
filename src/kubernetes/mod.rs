// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

pub mod client;
pub mod resource;
mod selector;

pub use client::{CredentialStrategy, KubeFeed};
pub use resource::{ObjectKey, Resource};
pub use selector::{LabelSelector, Requirement, SelectorError};
