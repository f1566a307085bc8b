//! Weight Module
//!
//! Optional capability a value implements to report its eviction cost.

use std::borrow::Cow;
use std::sync::Arc;

// == Weighted Trait ==
/// Reports how much of the cache's weight budget a value consumes.
///
/// The default is `1`, so `impl Weighted for MyValue {}` opts a type in
/// with unit cost. Override `weight` to charge more.
///
/// # Example
/// ```
/// use shardlru::Weighted;
///
/// struct Blob(Vec<u8>);
///
/// impl Weighted for Blob {
///     fn weight(&self) -> u64 {
///         self.0.len() as u64
///     }
/// }
///
/// assert_eq!(Blob(vec![0; 16]).weight(), 16);
/// ```
pub trait Weighted {
    /// Cost of this value against the cache's maximum weight.
    fn weight(&self) -> u64 {
        1
    }
}

macro_rules! unit_weight {
    ($($ty:ty),* $(,)?) => {
        $(impl Weighted for $ty {})*
    };
}

unit_weight!(
    (),
    bool,
    char,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    f32,
    f64,
    String,
    &'static str,
);

impl<T> Weighted for Vec<T> {}

impl<T> Weighted for Option<T> {}

impl Weighted for Cow<'static, str> {}

impl<T: Weighted + ?Sized> Weighted for Box<T> {
    fn weight(&self) -> u64 {
        (**self).weight()
    }
}

impl<T: Weighted + ?Sized> Weighted for Arc<T> {
    fn weight(&self) -> u64 {
        (**self).weight()
    }
}
