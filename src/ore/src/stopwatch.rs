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

//! Accumulated timing of repeated operations.

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

/// Counts operations and accumulates their duration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StopWatch {
    /// The number of timed operations.
    pub count: u64,
    /// The cumulated duration of timed operations.
    pub total: Duration,
}

impl StopWatch {
    /// Awaits `future`, accounting for the time it took.
    pub async fn time<F: Future>(&mut self, future: F) -> F::Output {
        let start = Instant::now();
        let output = future.await;
        self.record(start.elapsed());
        output
    }

    /// Accounts for one operation of duration `elapsed`.
    pub fn record(&mut self, elapsed: Duration) {
        self.count += 1;
        self.total += elapsed;
    }
}

impl fmt::Display for StopWatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {:.3?}", self.count, self.total)
    }
}
