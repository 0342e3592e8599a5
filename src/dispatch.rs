//! Named event listeners with copy-on-write listener lists.
//!
//! Listeners are registered under `type.name` typenames; the name part lets
//! several independent listeners share one event type and be replaced or
//! removed individually. Copies share their lists until one side changes.

use std::fmt;
use std::rc::Rc;

use crate::error::DispatchError;

pub type Listener<E> = Rc<dyn Fn(&E)>;

struct Entry<E: ?Sized> {
    name: String,
    listener: Listener<E>,
}

impl<E: ?Sized> Clone for Entry<E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            listener: Rc::clone(&self.listener),
        }
    }
}

pub struct Dispatch<E: ?Sized> {
    types: Vec<(String, Rc<[Entry<E>]>)>,
}

struct Typename<'a> {
    kind: &'a str,
    name: &'a str,
}

impl<E: ?Sized> Dispatch<E> {
    pub fn new<I, S>(types: I) -> Result<Self, DispatchError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut registered: Vec<(String, Rc<[Entry<E>]>)> = Vec::new();
        for kind in types {
            let kind = kind.into();
            if kind.is_empty()
                || kind.contains('.')
                || kind.chars().any(char::is_whitespace)
                || registered.iter().any(|(existing, _)| *existing == kind)
            {
                return Err(DispatchError::IllegalType(kind));
            }
            registered.push((kind, Rc::from(Vec::new())));
        }
        Ok(Self { types: registered })
    }

    /// Dispatch over a fixed set of event types known to be valid.
    pub(crate) fn with_types(types: &[&'static str]) -> Self {
        debug_assert!(types.iter().all(|kind| !kind.is_empty() && !kind.contains('.')));
        Self {
            types: types
                .iter()
                .map(|kind| ((*kind).to_owned(), Rc::from(Vec::new())))
                .collect(),
        }
    }

    /// Registers, replaces (`Some`) or removes (`None`) the listener for each
    /// whitespace-separated typename. `".name"` with `None` removes that name
    /// from every type.
    pub fn on(&mut self, typenames: &str, listener: Option<Listener<E>>) -> Result<(), DispatchError> {
        let parsed = self.parse(typenames)?;
        for Typename { kind, name } in parsed {
            if kind.is_empty() {
                if listener.is_none() {
                    for (_, entries) in &mut self.types {
                        *entries = without(entries, name, None);
                    }
                }
                continue;
            }

            if let Some((_, entries)) = self.types.iter_mut().find(|(existing, _)| existing == kind) {
                *entries = without(entries, name, listener.clone());
            }
        }
        Ok(())
    }

    /// Returns the first listener matching one of the typenames.
    pub fn listener(&self, typenames: &str) -> Result<Option<Listener<E>>, DispatchError> {
        let parsed = self.parse(typenames)?;
        Ok(parsed.into_iter().find_map(|Typename { kind, name }| {
            self.entries(kind)?
                .iter()
                .find(|entry| entry.name == name)
                .map(|entry| Rc::clone(&entry.listener))
        }))
    }

    /// Invokes every listener of `kind` in registration order.
    pub fn call(&self, kind: &str, event: &E) -> Result<(), DispatchError> {
        let entries = self
            .entries(kind)
            .map(Rc::clone)
            .ok_or_else(|| DispatchError::UnknownType(kind.to_owned()))?;
        for entry in entries.iter() {
            (entry.listener)(event);
        }
        Ok(())
    }

    pub fn copy(&self) -> Self {
        Self {
            types: self
                .types
                .iter()
                .map(|(kind, entries)| (kind.clone(), Rc::clone(entries)))
                .collect(),
        }
    }

    /// True when both dispatches still share the same list for `kind`.
    pub fn shares_listeners(&self, other: &Self, kind: &str) -> bool {
        match (self.entries(kind), other.entries(kind)) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// True when every type's list is shared with `other`.
    pub fn shares_all(&self, other: &Self) -> bool {
        self.types.len() == other.types.len()
            && self
                .types
                .iter()
                .zip(&other.types)
                .all(|((a_kind, a), (b_kind, b))| a_kind == b_kind && Rc::ptr_eq(a, b))
    }

    pub fn len(&self, kind: &str) -> usize {
        self.entries(kind).map_or(0, |entries| entries.len())
    }

    fn entries(&self, kind: &str) -> Option<&Rc<[Entry<E>]>> {
        self.types
            .iter()
            .find(|(existing, _)| existing == kind)
            .map(|(_, entries)| entries)
    }

    fn parse<'a>(&self, typenames: &'a str) -> Result<Vec<Typename<'a>>, DispatchError> {
        typenames
            .split_whitespace()
            .map(|token| {
                let (kind, name) = token.split_once('.').unwrap_or((token, ""));
                if !kind.is_empty() && self.entries(kind).is_none() {
                    return Err(DispatchError::UnknownType(kind.to_owned()));
                }
                Ok(Typename { kind, name })
            })
            .collect()
    }
}

fn without<E: ?Sized>(
    entries: &Rc<[Entry<E>]>,
    name: &str,
    replacement: Option<Listener<E>>,
) -> Rc<[Entry<E>]> {
    let mut next = entries
        .iter()
        .filter(|entry| entry.name != name)
        .cloned()
        .collect::<Vec<_>>();
    if let Some(listener) = replacement {
        next.push(Entry {
            name: name.to_owned(),
            listener,
        });
    }
    Rc::from(next)
}

impl<E: ?Sized> Clone for Dispatch<E> {
    fn clone(&self) -> Self {
        self.copy()
    }
}

impl<E: ?Sized> fmt::Debug for Dispatch<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.types.iter().map(|(kind, entries)| {
                (kind, entries.iter().map(|entry| entry.name.as_str()).collect::<Vec<_>>())
            }))
            .finish()
    }
}
