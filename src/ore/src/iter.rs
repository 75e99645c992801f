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

//! Iterator utilities.

/// Returns an iterator over the cartesian product of `lists`.
///
/// Tuples are produced in lexicographic order of their positions, the last
/// list varying fastest. The product of zero lists is a single empty tuple,
/// while the product is empty as soon as any of the lists is empty.
///
/// ```
/// use rolesync_ore::iter::product;
///
/// let tuples: Vec<_> = product(vec![vec!["a", "b"], vec!["x"]]).collect();
/// assert_eq!(tuples, vec![vec!["a", "x"], vec!["b", "x"]]);
///
/// assert_eq!(product(vec![vec!["a"], vec![]]).count(), 0);
/// assert_eq!(product::<&str>(vec![]).count(), 1);
/// ```
pub fn product<T: Clone>(lists: Vec<Vec<T>>) -> Product<T> {
    let exhausted = lists.iter().any(|list| list.is_empty());
    Product {
        indices: vec![0; lists.len()],
        lists,
        exhausted,
    }
}

/// Iterator type returned by [`product`].
#[derive(Debug)]
pub struct Product<T> {
    lists: Vec<Vec<T>>,
    indices: Vec<usize>,
    exhausted: bool,
}

impl<T> Product<T> {
    fn remaining(&self) -> usize {
        if self.exhausted {
            return 0;
        }
        // Reads the odometer as a mixed-radix number and subtracts it from the
        // total number of tuples.
        let mut consumed = 0usize;
        let mut total = 1usize;
        for (list, index) in self.lists.iter().zip(&self.indices).rev() {
            consumed = consumed.saturating_add(index.saturating_mul(total));
            total = total.saturating_mul(list.len());
        }
        total - consumed
    }
}

impl<T: Clone> Iterator for Product<T> {
    type Item = Vec<T>;

    fn next(&mut self) -> Option<Vec<T>> {
        if self.exhausted {
            return None;
        }
        let item = self
            .lists
            .iter()
            .zip(&self.indices)
            .map(|(list, index)| list[*index].clone())
            .collect();

        self.exhausted = true;
        for (list, index) in self.lists.iter().zip(self.indices.iter_mut()).rev() {
            *index += 1;
            if *index < list.len() {
                self.exhausted = false;
                break;
            }
            *index = 0;
        }
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}

impl<T: Clone> ExactSizeIterator for Product<T> {}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::product;

    #[crate::test]
    fn test_product_order() {
        let tuples: Vec<_> = product(vec![vec![1, 2], vec![3, 4]]).collect();
        assert_eq!(
            tuples,
            vec![vec![1, 3], vec![1, 4], vec![2, 3], vec![2, 4]]
        );
    }

    #[crate::test]
    fn test_product_degenerate() {
        assert_eq!(product::<u8>(vec![]).collect::<Vec<_>>(), vec![vec![]]);
        assert_eq!(product(vec![vec![1], vec![], vec![2]]).count(), 0);
        assert_eq!(product(vec![Vec::<u8>::new()]).len(), 0);
    }

    #[crate::test]
    fn test_product_size_hint_tracks_progress() {
        let mut iter = product(vec![vec!['a', 'b', 'c'], vec!['x', 'y']]);
        assert_eq!(iter.len(), 6);
        iter.next();
        iter.next();
        iter.next();
        assert_eq!(iter.len(), 3);
        assert_eq!(iter.next(), Some(vec!['b', 'y']));
    }

    proptest! {
        #[crate::test]
        fn proptest_product_len(lens in proptest::collection::vec(0usize..4, 0..4)) {
            let lists: Vec<Vec<usize>> = lens.iter().map(|len| (0..*len).collect()).collect();
            let expected: usize = lens.iter().product();
            prop_assert_eq!(product(lists).count(), expected);
        }
    }
}
