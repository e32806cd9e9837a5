//! Device identity acceptors.
//!
//! An acceptor is a predicate over a device's USB vendor/product identity,
//! used to pick the right physical device out of everything attached.
//! Acceptors compose: [`AndAcceptor`] and [`OrAcceptor`] combine two
//! predicates, [`NthMatchAcceptor`] selects the n-th device (in discovery
//! order) that satisfies an inner acceptor.

use serde::{Deserialize, Serialize};

/// USB identity of a device as reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl DeviceIdentity {
    pub const fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
        }
    }
}

impl std::fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04X}:{:04X}", self.vendor_id, self.product_id)
    }
}

/// Predicate deciding whether a discovered device is the one to drive.
///
/// `accept` takes `&mut self` because some acceptors count the devices they
/// have seen. Call [`HidAcceptor::reset`] before each discovery session.
pub trait HidAcceptor: Send {
    fn accept(&mut self, identity: &DeviceIdentity) -> bool;

    /// Forget any per-session state.
    fn reset(&mut self) {}
}

impl<A: HidAcceptor + ?Sized> HidAcceptor for Box<A> {
    fn accept(&mut self, identity: &DeviceIdentity) -> bool {
        (**self).accept(identity)
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

/// Accepts every device from one vendor.
#[derive(Debug, Clone, Copy)]
pub struct VendorAcceptor {
    vendor_id: u16,
}

impl VendorAcceptor {
    pub fn new(vendor_id: u16) -> Self {
        Self { vendor_id }
    }
}

impl HidAcceptor for VendorAcceptor {
    fn accept(&mut self, identity: &DeviceIdentity) -> bool {
        identity.vendor_id == self.vendor_id
    }
}

/// Accepts exactly one vendor/product pair.
#[derive(Debug, Clone, Copy)]
pub struct ProductAcceptor {
    identity: DeviceIdentity,
}

impl ProductAcceptor {
    pub fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            identity: DeviceIdentity::new(vendor_id, product_id),
        }
    }
}

impl HidAcceptor for ProductAcceptor {
    fn accept(&mut self, identity: &DeviceIdentity) -> bool {
        *identity == self.identity
    }
}

/// Accepts when both inner acceptors accept.
///
/// Both sides are always evaluated so that counting acceptors on either side
/// see every device.
pub struct AndAcceptor<A, B> {
    left: A,
    right: B,
}

impl<A: HidAcceptor, B: HidAcceptor> HidAcceptor for AndAcceptor<A, B> {
    fn accept(&mut self, identity: &DeviceIdentity) -> bool {
        let left = self.left.accept(identity);
        let right = self.right.accept(identity);
        left && right
    }

    fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
    }
}

/// Accepts when either inner acceptor accepts.
pub struct OrAcceptor<A, B> {
    left: A,
    right: B,
}

impl<A: HidAcceptor, B: HidAcceptor> HidAcceptor for OrAcceptor<A, B> {
    fn accept(&mut self, identity: &DeviceIdentity) -> bool {
        let left = self.left.accept(identity);
        let right = self.right.accept(identity);
        left || right
    }

    fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
    }
}

/// Accepts only the n-th (0-indexed) device that the inner acceptor accepts.
pub struct NthMatchAcceptor<A> {
    target: usize,
    seen: usize,
    inner: A,
}

impl<A: HidAcceptor> NthMatchAcceptor<A> {
    pub fn new(target: usize, inner: A) -> Self {
        Self {
            target,
            seen: 0,
            inner,
        }
    }
}

impl<A: HidAcceptor> HidAcceptor for NthMatchAcceptor<A> {
    fn accept(&mut self, identity: &DeviceIdentity) -> bool {
        if !self.inner.accept(identity) {
            return false;
        }
        let index = self.seen;
        self.seen += 1;
        index == self.target
    }

    fn reset(&mut self) {
        self.seen = 0;
        self.inner.reset();
    }
}

/// Combinators available on every acceptor.
pub trait AcceptorExt: HidAcceptor + Sized {
    fn and<B: HidAcceptor>(self, other: B) -> AndAcceptor<Self, B> {
        AndAcceptor {
            left: self,
            right: other,
        }
    }

    fn or<B: HidAcceptor>(self, other: B) -> OrAcceptor<Self, B> {
        OrAcceptor {
            left: self,
            right: other,
        }
    }

    fn nth(self, target: usize) -> NthMatchAcceptor<Self> {
        NthMatchAcceptor::new(target, self)
    }
}

impl<A: HidAcceptor + Sized> AcceptorExt for A {}

/// Run an acceptor over a discovery sequence and return the index of the
/// first accepted entry.
pub fn select<A: HidAcceptor + ?Sized>(
    acceptor: &mut A,
    identities: impl IntoIterator<Item = DeviceIdentity>,
) -> Option<usize> {
    acceptor.reset();
    identities
        .into_iter()
        .position(|identity| acceptor.accept(&identity))
}
