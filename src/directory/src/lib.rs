// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Directory entries, search specifications and template expansion.
//!
//! The heart of this crate is [`SearchResult::generate_values`], which turns
//! one directory entry, plus the entries of an optional sub-search, into the
//! attribute bindings used to instantiate role and grant templates.

mod dn;
mod entry;
mod format;
mod resolve;
mod search;

pub use dn::{AttributeTypeAndValue, Dn, DnError, Rdn};
pub use entry::Entry;
pub use format::{list_expressions, list_variables, Format, FormatError};
pub use resolve::{SearchResult, Values};
pub use search::{Connector, Directory, DirectoryError, Scope, Search, Subsearch};
