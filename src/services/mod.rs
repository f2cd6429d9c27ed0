// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - credentials and identity verification.

pub mod identity;
pub mod password;

pub use identity::{IdentityError, IdentityVerifier, VerifiedIdentity};
