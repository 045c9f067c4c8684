use anyhow::Result;
use std::cell::RefCell;
use std::rc::Rc;

type Observer<A> = Rc<RefCell<dyn FnMut(&A) -> Result<()>>>;

/// Synchronous multicast signal. Observers run in attachment order on the
/// thread that calls `emit`; the first observer error aborts delivery to the
/// observers after it and is returned to the emitter.
///
/// Connecting the same closure twice is allowed and results in double
/// invocation. Observers connected while an emission is in flight are not
/// invoked for that emission.
pub struct Signal<A> {
    observers: RefCell<Vec<Observer<A>>>,
}

impl<A> Default for Signal<A> {
    fn default() -> Self {
        Self {
            observers: RefCell::new(Vec::new()),
        }
    }
}

impl<A> Signal<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect<F>(&self, observer: F)
    where
        F: FnMut(&A) -> Result<()> + 'static,
    {
        self.observers
            .borrow_mut()
            .push(Rc::new(RefCell::new(observer)));
    }

    pub fn emit(&self, args: &A) -> Result<()> {
        // Snapshot so an observer may connect new observers mid-emission.
        let snapshot: Vec<Observer<A>> = self.observers.borrow().clone();
        for observer in snapshot {
            (observer.borrow_mut())(args)?;
        }
        Ok(())
    }

    pub fn observer_count(&self) -> usize {
        self.observers.borrow().len()
    }
}
