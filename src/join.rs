//! Data join: reconciles a new data sequence against bound handles.
//!
//! Groups are sparse (`None` marks an empty slot). The resulting partitions
//! are sparse too: `enter` and `update` are indexed by position in the new
//! data, `exit` by position in the old group.

use std::collections::HashMap;
use std::hash::Hash;

/// A persistent handle together with the datum currently bound to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Bound<H, D> {
    pub handle: H,
    pub datum: D,
}

impl<H, D> Bound<H, D> {
    pub fn new(handle: H, datum: D) -> Self {
        Self { handle, datum }
    }
}

/// Placeholder for a datum that has no handle yet.
#[derive(Debug, Clone, PartialEq)]
pub struct Enter<D> {
    pub datum: D,
    /// Data index of the nearest following update, i.e. the handle a new
    /// element should be inserted before. `None` means append.
    pub next: Option<usize>,
}

pub type Group<H, D> = Vec<Option<Bound<H, D>>>;

#[derive(Debug, Clone, PartialEq)]
pub struct Join<H, D> {
    pub enter: Vec<Option<Enter<D>>>,
    pub update: Vec<Option<Bound<H, D>>>,
    pub exit: Vec<Option<Bound<H, D>>>,
}

/// Binds `data` to `group` by position.
pub fn bind_index<H, D>(group: Group<H, D>, data: Vec<D>) -> Join<H, D> {
    let data_len = data.len();
    let group_len = group.len();
    let mut enter = empty(data_len);
    let mut update = empty(data_len);
    let mut exit = empty(group_len);

    let mut slots = group.into_iter();
    for (i, datum) in data.into_iter().enumerate() {
        match slots.next().flatten() {
            Some(bound) => update[i] = Some(Bound::new(bound.handle, datum)),
            None => enter[i] = Some(Enter { datum, next: None }),
        }
    }
    for (i, slot) in slots.enumerate() {
        exit[data_len + i] = slot;
    }

    link_enters(Join { enter, update, exit })
}

/// Binds `data` to `group` by key. Old handles are keyed by their current
/// datum, new data by itself; both get their position as the second argument.
pub fn bind_key<H, D, K>(group: Group<H, D>, data: Vec<D>, key: impl Fn(&D, usize) -> K) -> Join<H, D>
where
    K: Eq + Hash,
{
    let data_len = data.len();
    let mut enter = empty(data_len);
    let mut update = empty(data_len);
    let mut exit = empty(group.len());

    let mut slots = group;
    let mut by_key: HashMap<K, usize> = HashMap::new();
    for (i, slot) in slots.iter_mut().enumerate() {
        let Some(bound) = slot else {
            continue;
        };
        let k = key(&bound.datum, i);
        if by_key.contains_key(&k) {
            exit[i] = slot.take();
        } else {
            by_key.insert(k, i);
        }
    }

    for (i, datum) in data.into_iter().enumerate() {
        let matched = by_key
            .remove(&key(&datum, i))
            .and_then(|slot| slots[slot].take());
        match matched {
            Some(bound) => update[i] = Some(Bound::new(bound.handle, datum)),
            None => enter[i] = Some(Enter { datum, next: None }),
        }
    }

    for (i, slot) in slots.into_iter().enumerate() {
        if slot.is_some() {
            exit[i] = slot;
        }
    }

    link_enters(Join { enter, update, exit })
}

fn empty<T>(len: usize) -> Vec<Option<T>> {
    std::iter::repeat_with(|| None).take(len).collect()
}

fn link_enters<H, D>(mut join: Join<H, D>) -> Join<H, D> {
    let len = join.enter.len();
    let mut next = 0;
    for i in 0..len {
        let Some(entering) = join.enter[i].as_mut() else {
            continue;
        };
        if i >= next {
            next = i + 1;
        }
        while next < len && join.update[next].is_none() {
            next += 1;
        }
        entering.next = (next < len).then_some(next);
    }
    join
}

impl<H, D> Join<H, D> {
    pub fn entering(&self) -> impl Iterator<Item = &Enter<D>> {
        self.enter.iter().flatten()
    }

    pub fn updating(&self) -> impl Iterator<Item = &Bound<H, D>> {
        self.update.iter().flatten()
    }

    pub fn exiting(&self) -> impl Iterator<Item = &Bound<H, D>> {
        self.exit.iter().flatten()
    }

    /// Materializes every entering datum with `make` and merges it with the
    /// updates in data order. Returns the merged group and the exits.
    pub fn join(self, mut make: impl FnMut(&D, usize) -> H) -> (Vec<Bound<H, D>>, Vec<Bound<H, D>>) {
        let merged = self
            .enter
            .into_iter()
            .zip(self.update)
            .enumerate()
            .filter_map(|(i, pair)| match pair {
                (_, Some(bound)) => Some(bound),
                (Some(Enter { datum, .. }), None) => Some(Bound::new(make(&datum, i), datum)),
                (None, None) => None,
            })
            .collect();
        let exit = self.exit.into_iter().flatten().collect();
        (merged, exit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(data: &[&'static str]) -> Group<usize, &'static str> {
        data.iter()
            .enumerate()
            .map(|(handle, datum)| Some(Bound::new(handle, *datum)))
            .collect()
    }

    fn key(datum: &&'static str, _: usize) -> &'static str {
        *datum
    }

    #[test]
    fn keyed_join_partitions_by_identity() {
        let join = bind_key(group(&["a", "b"]), vec!["b", "c"], key);

        let update = join.updating().map(|bound| (bound.handle, bound.datum)).collect::<Vec<_>>();
        let enter = join.entering().map(|enter| enter.datum).collect::<Vec<_>>();
        let exit = join.exiting().map(|bound| bound.datum).collect::<Vec<_>>();
        assert_eq!(update, vec![(1, "b")]);
        assert_eq!(enter, vec!["c"]);
        assert_eq!(exit, vec!["a"]);
    }

    #[test]
    fn duplicate_old_keys_exit_and_duplicate_new_keys_enter() {
        let join = bind_key(group(&["a", "a"]), vec!["a", "a"], key);
        assert_eq!(join.update[0].as_ref().map(|b| b.handle), Some(0));
        assert!(join.update[1].is_none());
        assert_eq!(join.enter[1].as_ref().map(|e| e.datum), Some("a"));
        assert_eq!(join.exit[1].as_ref().map(|b| b.handle), Some(1));
    }

    #[test]
    fn index_join_rebinds_by_position() {
        let join = bind_index(group(&["a", "b", "c"]), vec!["x", "y"]);
        assert_eq!(
            join.updating().map(|bound| (bound.handle, bound.datum)).collect::<Vec<_>>(),
            vec![(0, "x"), (1, "y")]
        );
        assert_eq!(join.exit[2].as_ref().map(|b| b.datum), Some("c"));

        let join = bind_index(vec![Some(Bound::new(7, "a")), None], vec!["p", "q", "r"]);
        assert_eq!(join.enter[1].as_ref().map(|e| e.datum), Some("q"));
        assert_eq!(join.enter[2].as_ref().map(|e| e.datum), Some("r"));
    }

    #[test]
    fn entering_placeholders_point_at_next_survivor() {
        let join = bind_key(group(&["b", "d"]), vec!["a", "b", "c", "d", "e"], key);
        let anchors = join
            .enter
            .iter()
            .map(|slot| slot.as_ref().map(|enter| enter.next))
            .collect::<Vec<_>>();
        assert_eq!(
            anchors,
            vec![Some(Some(1)), None, Some(Some(3)), None, Some(None)]
        );
    }

    #[test]
    fn join_merges_in_data_order() {
        let join = bind_key(group(&["b", "z"]), vec!["a", "b", "c"], key);
        let (merged, exit) = join.join(|_, i| 100 + i);
        assert_eq!(
            merged.iter().map(|bound| (bound.handle, bound.datum)).collect::<Vec<_>>(),
            vec![(100, "a"), (0, "b"), (102, "c")]
        );
        assert_eq!(exit, vec![Bound::new(1, "z")]);
    }
}
