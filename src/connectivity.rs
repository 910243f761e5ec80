use std::cell::RefCell;
use std::rc::Rc;

use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};

/// Stream of "connectivity restored" events. Ends when the observer is dropped.
pub type Restored = UnboundedReceiver<()>;

/// Host-provided network status. The sync core never checks the network itself.
pub trait Connectivity {
    fn is_online(&self) -> bool;

    /// Each offline -> online transition after this call yields one item.
    fn subscribe_restored(&self) -> Restored;
}

impl<C: Connectivity + ?Sized> Connectivity for Rc<C> {
    fn is_online(&self) -> bool {
        (**self).is_online()
    }

    fn subscribe_restored(&self) -> Restored {
        (**self).subscribe_restored()
    }
}

#[derive(Default)]
struct Subscribers {
    senders: Vec<UnboundedSender<()>>,
}

impl Subscribers {
    fn add(&mut self) -> Restored {
        let (tx, rx) = unbounded();
        self.senders.push(tx);
        rx
    }

    fn notify(&mut self) {
        self.senders.retain(|tx| tx.unbounded_send(()).is_ok());
    }
}

struct ManualState {
    online: bool,
    subscribers: Subscribers,
}

/// Connectivity flipped by hand. Used natively and in tests.
#[derive(Clone)]
pub struct ManualConnectivity {
    state: Rc<RefCell<ManualState>>,
}

impl ManualConnectivity {
    pub fn new(online: bool) -> Self {
        Self {
            state: Rc::new(RefCell::new(ManualState {
                online,
                subscribers: Subscribers::default(),
            })),
        }
    }

    pub fn set_online(&self, online: bool) {
        let mut state = self.state.borrow_mut();
        let restored = online && !state.online;
        state.online = online;
        if restored {
            state.subscribers.notify();
        }
    }
}

impl Connectivity for ManualConnectivity {
    fn is_online(&self) -> bool {
        self.state.borrow().online
    }

    fn subscribe_restored(&self) -> Restored {
        self.state.borrow_mut().subscribers.add()
    }
}

#[cfg(target_arch = "wasm32")]
pub use browser::BrowserConnectivity;

#[cfg(target_arch = "wasm32")]
mod browser {
    use std::cell::RefCell;
    use std::rc::Rc;

    use wasm_bindgen::prelude::*;
    use wasm_bindgen::JsCast;

    use super::{Connectivity, Restored, Subscribers};

    /// `navigator.onLine` plus the window `online` event.
    #[derive(Clone)]
    pub struct BrowserConnectivity {
        subscribers: Rc<RefCell<Subscribers>>,
    }

    impl BrowserConnectivity {
        pub fn install() -> Self {
            let subscribers = Rc::new(RefCell::new(Subscribers::default()));
            if let Some(window) = web_sys::window() {
                let subs = subscribers.clone();
                let on_online = Closure::<dyn FnMut()>::new(move || {
                    log::info!("connectivity restored");
                    subs.borrow_mut().notify();
                });
                if window
                    .add_event_listener_with_callback("online", on_online.as_ref().unchecked_ref())
                    .is_err()
                {
                    log::warn!("could not listen for online events");
                }
                // lives as long as the page
                on_online.forget();
            }
            Self { subscribers }
        }
    }

    impl Connectivity for BrowserConnectivity {
        fn is_online(&self) -> bool {
            web_sys::window()
                .map(|w| w.navigator().on_line())
                .unwrap_or(false)
        }

        fn subscribe_restored(&self) -> Restored {
            self.subscribers.borrow_mut().add()
        }
    }
}
