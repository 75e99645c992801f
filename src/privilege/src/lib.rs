// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Privilege catalog and grant normalization.
//!
//! Grants come from two places: the templates of the rules, and the
//! inspection of the database cluster. Both are described by the single
//! [`Grant`] type and must go through [`Grant::normalize`] before being
//! compared.

mod catalog;
mod grant;
mod refmap;

pub use catalog::{lookup, Privilege, Scope, CATALOG};
pub use grant::Grant;
pub use refmap::{PrivilegeError, PrivilegeRef, RefMap};
