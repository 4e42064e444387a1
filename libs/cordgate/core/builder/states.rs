//! Compile-time progress of a [`super::GatewayBuilder`]
//!
//! A coordinator cannot identify without a bot token and has nowhere to
//! report shard events without a delegate, so `build()` only exists once
//! both markers read `Has*`.

use std::marker::PhantomData;

mod sealed {
    pub trait Sealed {}
}

/// Whether the bot token was supplied
pub trait TokenState: sealed::Sealed {}

/// Whether the event delegate was supplied
pub trait DelegateState: sealed::Sealed {}

pub struct NoToken;
pub struct HasToken;
pub struct NoDelegate;
pub struct HasDelegate;

impl sealed::Sealed for NoToken {}
impl sealed::Sealed for HasToken {}
impl sealed::Sealed for NoDelegate {}
impl sealed::Sealed for HasDelegate {}

impl TokenState for NoToken {}
impl TokenState for HasToken {}
impl DelegateState for NoDelegate {}
impl DelegateState for HasDelegate {}

/// Zero-sized carrier for the two markers
#[derive(Debug, Clone, Copy)]
pub struct TypeState<T, D> {
    _markers: PhantomData<(T, D)>,
}

impl<T, D> TypeState<T, D> {
    pub(crate) fn new() -> Self {
        Self {
            _markers: PhantomData,
        }
    }
}
