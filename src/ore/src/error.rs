// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE file at the
// root of this repository, or online at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error utilities.

use std::error::Error;
use std::fmt;

/// Extension methods for [`std::error::Error`].
pub trait ErrorExt: Error {
    /// Returns a type that displays the error, along with the chain of
    /// _source_ errors, separated by `": "`.
    fn display_with_causes(&self) -> ErrorChainDisplay<'_>;
}

impl<E: Error + 'static> ErrorExt for E {
    fn display_with_causes(&self) -> ErrorChainDisplay<'_> {
        ErrorChainDisplay(self)
    }
}

/// Displays an error and its chain of sources.
///
/// Returned by [`ErrorExt::display_with_causes`].
#[derive(Debug)]
pub struct ErrorChainDisplay<'a>(&'a (dyn Error + 'static));

impl fmt::Display for ErrorChainDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = self.0.source();
        while let Some(err) = source {
            write!(f, ": {}", err)?;
            source = err.source();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::ErrorExt;

    #[derive(Debug)]
    struct Inner;

    impl std::fmt::Display for Inner {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "connection refused")
        }
    }

    impl std::error::Error for Inner {}

    #[derive(Debug)]
    struct Outer(Inner);

    impl std::fmt::Display for Outer {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "search failed")
        }
    }

    impl std::error::Error for Outer {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(&self.0)
        }
    }

    #[crate::test]
    fn test_display_with_causes() {
        let err = Outer(Inner);
        assert_eq!(
            err.display_with_causes().to_string(),
            "search failed: connection refused"
        );
        assert_eq!(Inner.display_with_causes().to_string(), "connection refused");
    }
}
