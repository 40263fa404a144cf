//! Ties in-flight work to the component that started it.
//!
//! A [`Lifetime`] is owned by a dialog or polling task. Work that must not
//! outlive it races against a [`LifetimeToken`]; ending the lifetime (or
//! dropping it) resolves every token.

use tokio::sync::watch;

#[derive(Debug)]
pub struct Lifetime {
    tx: watch::Sender<bool>,
}

impl Lifetime {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn token(&self) -> LifetimeToken {
        LifetimeToken {
            rx: self.tx.subscribe(),
        }
    }

    pub fn end(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_ended(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for Lifetime {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct LifetimeToken {
    rx: watch::Receiver<bool>,
}

impl LifetimeToken {
    pub fn is_ended(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolves once the owning [`Lifetime`] has ended or been dropped.
    pub async fn ended(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}
