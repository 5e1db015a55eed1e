use std::cell::RefCell;
use std::rc::Rc;

use crate::error::Result;
use crate::loader;
use crate::resources::{MediaLoader, Resources};

pub mod animation;
pub mod camera;
pub mod entity;
pub mod events;
pub mod face;
pub mod scene;
pub mod sequence;
pub mod texture;
pub mod traits;

/// Immutable surroundings of one compile run: the document URL relative
/// references resolve against, plus the host-provided registries and media
/// loader. Cheap to clone, handed by value into sub-compilers.
#[derive(Clone)]
pub struct Ctx {
    base_url: Rc<str>,
    pub resources: Rc<Resources>,
    pub media: Rc<dyn MediaLoader>,
}

impl Ctx {
    pub fn new(base_url: &str, resources: Rc<Resources>, media: Rc<dyn MediaLoader>) -> Self {
        Ctx { base_url: Rc::from(base_url), resources, media }
    }

    pub fn resolve_url(&self, value: &str) -> String {
        loader::resolve_url(&self.base_url, value)
    }
}

/// One-shot outcome cell. The first stored outcome wins; later calls get a
/// clone of it and never recompute.
pub struct Once<T> {
    slot: RefCell<Option<Result<T>>>,
}

impl<T: Clone> Once<T> {
    pub fn new() -> Self {
        Once { slot: RefCell::new(None) }
    }

    pub fn cached(&self) -> Option<Result<T>> {
        self.slot.borrow().clone()
    }

    pub fn store(&self, outcome: Result<T>) -> Result<T> {
        let mut slot = self.slot.borrow_mut();
        slot.get_or_insert(outcome).clone()
    }
}

impl<T: Clone> Default for Once<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::Once;
    use crate::error::CompileError;

    #[test]
    fn first_stored_outcome_wins() {
        let cell: Once<u32> = Once::new();
        assert!(cell.cached().is_none());
        assert_eq!(cell.store(Ok(7)).expect("stored ok"), 7);
        assert_eq!(cell.store(Ok(9)).expect("kept first"), 7);
        assert_eq!(cell.cached().and_then(|r| r.ok()), Some(7));
    }

    #[test]
    fn stored_errors_replay() {
        let cell: Once<u32> = Once::new();
        let err = cell
            .store(Err(CompileError::definition("broken")))
            .expect_err("stored error");
        assert_eq!(err.to_string(), "broken");
        assert!(cell.store(Ok(1)).is_err(), "error outcome is sticky");
    }
}
