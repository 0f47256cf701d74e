//! Scoped bindings
//!
//! A binding is a named cell whose externally visible value is overridden for the duration of
//! one wrapper invocation. Frames that declare a binding keep their own copy of the value; on
//! invocation the nearest declaring frame's copy is swapped into the cell and swapped back out
//! when the call exits, however it exits.
//!
//! Every cell keeps a stack of the slots currently installed in it. Pushing a slot first saves
//! the live value into the slot it covers, popping one saves the live value into the popped
//! slot and reinstates the one below. A slot that is installed more than once, as when a
//! wrapper calls a descendant of itself, therefore always hands over its latest value.

use crate::error::ConfigError;
use crate::frame::Frame;
use std::any::Any;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::trace;

thread_local! {
    static CELLS: RefCell<HashMap<String, Weak<dyn ScopedBinding>>> = RefCell::new(HashMap::new());
}

/// A cell that frames can rebind. Implemented by [`DynamicCell`]; the value type is erased so a
/// frame can store bindings of different types side by side.
pub trait ScopedBinding {
    fn qualified_name(&self) -> &str;

    /// Slot holding a copy of the value currently visible in the cell
    fn capture(self: Rc<Self>) -> Box<dyn StoredBinding>;
}

/// One frame's copy of a binding value
pub trait StoredBinding {
    fn qualified_name(&self) -> &str;

    /// Make this slot's value visible in its cell
    fn enter(&self);

    /// Save the visible value into this slot and reinstate what was visible before `enter`
    fn exit(&self);

    /// Clone of the stored value, as of the last time the slot was swapped out
    fn value(&self) -> Box<dyn Any>;
}

struct Layer<T> {
    slot: Rc<RefCell<T>>,
    // Value visible before the bottom layer was pushed
    outside: Option<T>,
}

/// A named, globally addressable cell
///
/// Cells are declared into a per-thread table so that contexts can refer to them by qualified
/// name. The table holds weak references: a cell lives as long as the program or a frame's
/// binding store holds it.
pub struct DynamicCell<T> {
    name: String,
    value: RefCell<T>,
    layers: RefCell<Vec<Layer<T>>>,
}

impl<T: Clone + 'static> DynamicCell<T> {
    /// Declare a cell under `name` with an initial value
    ///
    /// Fails if a live cell with the same name is already declared on this thread.
    pub fn declare(name: impl Into<String>, initial: T) -> Result<Rc<Self>, ConfigError> {
        let name = name.into();
        let cell = Rc::new(DynamicCell {
            name: name.clone(),
            value: RefCell::new(initial),
            layers: RefCell::new(Vec::new()),
        });
        let erased: Rc<dyn ScopedBinding> = cell.clone();

        CELLS.with(|cells| {
            let mut cells = cells.borrow_mut();
            if cells.get(&name).and_then(Weak::upgrade).is_some() {
                return Err(ConfigError::DuplicateBinding(name.clone()));
            }
            cells.insert(name.clone(), Rc::downgrade(&erased));
            Ok(())
        })?;

        trace!(binding = %name, "Declared dynamic cell");
        Ok(cell)
    }

    pub fn get(&self) -> T {
        self.value.borrow().clone()
    }

    fn push_layer(&self, slot: Rc<RefCell<T>>) {
        let mut layers = self.layers.borrow_mut();
        let live = self.get();
        let outside = match layers.last() {
            Some(covered) => {
                *covered.slot.borrow_mut() = live;
                None
            }
            None => Some(live),
        };
        let incoming = slot.borrow().clone();
        *self.value.borrow_mut() = incoming;
        layers.push(Layer { slot, outside });
    }

    fn pop_layer(&self) {
        let mut layers = self.layers.borrow_mut();
        let Some(layer) = layers.pop() else {
            return;
        };
        *layer.slot.borrow_mut() = self.get();
        let restored = match layers.last() {
            Some(uncovered) => Some(uncovered.slot.borrow().clone()),
            None => layer.outside,
        };
        if let Some(restored) = restored {
            *self.value.borrow_mut() = restored;
        }
    }
}

impl<T> DynamicCell<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set(&self, value: T) {
        *self.value.borrow_mut() = value;
    }

    pub fn replace(&self, value: T) -> T {
        self.value.replace(value)
    }

    /// Borrow the visible value. Do not invoke wrapped callbacks from inside `f`: they may
    /// need to rebind this cell.
    pub fn with<U>(&self, f: impl FnOnce(&T) -> U) -> U {
        f(&self.value.borrow())
    }
}

impl<T: fmt::Debug> fmt::Debug for DynamicCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicCell")
            .field("name", &self.name)
            .field("value", &self.value)
            .field("depth", &self.layers.borrow().len())
            .finish()
    }
}

impl<T: Clone + 'static> ScopedBinding for DynamicCell<T> {
    fn qualified_name(&self) -> &str {
        &self.name
    }

    fn capture(self: Rc<Self>) -> Box<dyn StoredBinding> {
        let value = Rc::new(RefCell::new(self.get()));
        Box::new(CellSlot { cell: self, value })
    }
}

impl<T> Drop for DynamicCell<T> {
    fn drop(&mut self) {
        let _ = CELLS.try_with(|cells| {
            let mut cells = cells.borrow_mut();
            let dead = cells
                .get(&self.name)
                .map_or(false, |weak| weak.upgrade().is_none());
            if dead {
                cells.remove(&self.name);
            }
        });
    }
}

struct CellSlot<T> {
    cell: Rc<DynamicCell<T>>,
    value: Rc<RefCell<T>>,
}

impl<T: Clone + 'static> StoredBinding for CellSlot<T> {
    fn qualified_name(&self) -> &str {
        &self.cell.name
    }

    fn enter(&self) {
        self.cell.push_layer(Rc::clone(&self.value));
    }

    fn exit(&self) {
        self.cell.pop_layer();
    }

    fn value(&self) -> Box<dyn Any> {
        Box::new(self.value.borrow().clone())
    }
}

/// Find a declared, still live cell by qualified name
pub fn lookup(name: &str) -> Option<Rc<dyn ScopedBinding>> {
    CELLS.with(|cells| cells.borrow().get(name).and_then(Weak::upgrade))
}

/// Run `body` with `value` visible in `cell`, restoring the previous value on every exit path
pub fn with_scoped_value<T, U>(cell: &DynamicCell<T>, value: T, body: impl FnOnce() -> U) -> U
where
    T: Clone + 'static,
{
    cell.push_layer(Rc::new(RefCell::new(value)));
    let _restore = ScopedValue { cell };
    body()
}

struct ScopedValue<'a, T: Clone + 'static> {
    cell: &'a DynamicCell<T>,
}

impl<T: Clone + 'static> Drop for ScopedValue<'_, T> {
    fn drop(&mut self) {
        self.cell.pop_layer();
    }
}

/// Values a frame holds for the bindings it declares
pub struct BindingStore {
    slots: BTreeMap<String, Box<dyn StoredBinding>>,
}

impl BindingStore {
    /// Capture the current value of each named cell
    pub(crate) fn capture<I, S>(names: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut slots = BTreeMap::new();
        for name in names {
            let name = name.as_ref();
            let cell = lookup(name).ok_or_else(|| ConfigError::UnknownBinding(name.to_string()))?;
            slots.insert(name.to_string(), cell.capture());
        }
        Ok(BindingStore { slots })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.slots.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Clone of the value this frame holds for `name`, if it declares it and the type matches
    ///
    /// While an invocation has the binding installed the live value is in the cell; the store
    /// catches up when the binding is swapped out.
    pub fn stored<T: Clone + 'static>(&self, name: &str) -> Option<T> {
        let value = self.slots.get(name)?.value();
        value.downcast::<T>().ok().map(|value| *value)
    }

    fn slot(&self, name: &str) -> Option<&dyn StoredBinding> {
        self.slots.get(name).map(|slot| slot.as_ref())
    }
}

impl fmt::Debug for BindingStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.slots.keys()).finish()
    }
}

/// A binding name and the frame whose declaration wins for it
pub struct ResolvedBinding<'a> {
    pub name: String,
    pub owner: &'a Frame,
}

/// Walk from `frame` outward and pick the innermost declaring frame for every binding name
pub fn resolve(frame: &Frame) -> Vec<ResolvedBinding<'_>> {
    let mut seen = HashSet::new();
    let mut resolved = Vec::new();
    for owner in frame.ancestors() {
        let Some(store) = owner.bindings() else {
            continue;
        };
        for name in store.names() {
            if seen.insert(name.clone()) {
                resolved.push(ResolvedBinding { name, owner });
            }
        }
    }
    resolved
}

/// Bindings swapped in for one invocation; dropping the scope writes the cells' values back to
/// their owning frames and restores what was visible before, innermost first.
pub(crate) struct BindingScope<'a> {
    installed: Vec<&'a dyn StoredBinding>,
}

impl<'a> BindingScope<'a> {
    pub(crate) fn enter(frame: &'a Frame) -> Self {
        let mut installed = Vec::new();
        for ResolvedBinding { name, owner } in resolve(frame) {
            let Some(slot) = owner.bindings().and_then(|store| store.slot(&name)) else {
                continue;
            };
            slot.enter();
            trace!(binding = %name, owner = %owner.id(), "Installed scoped binding");
            installed.push(slot);
        }
        BindingScope { installed }
    }
}

impl Drop for BindingScope<'_> {
    fn drop(&mut self) {
        while let Some(slot) = self.installed.pop() {
            slot.exit();
            trace!(binding = %slot.qualified_name(), "Restored scoped binding");
        }
    }
}
