use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// An index tagged with the table it points into, so a plane number can't be
/// passed where a vertex number is expected.
#[derive(Debug, Ord, PartialOrd, Eq, PartialEq)]
pub struct TypedInt<B, X>(B, PhantomData<X>)
where
    B: Copy;

impl<B, X> Copy for TypedInt<B, X> where B: Copy {}

impl<B, X> Clone for TypedInt<B, X>
where
    B: Copy,
{
    fn clone(&self) -> Self {
        Self(self.0, PhantomData)
    }
}

impl<B, X> Hash for TypedInt<B, X>
where
    B: Copy + Hash,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl<B, X> From<B> for TypedInt<B, X>
where
    B: Copy,
{
    fn from(inner: B) -> Self {
        Self(inner, PhantomData)
    }
}

impl<B, X> Display for TypedInt<B, X>
where
    B: Copy + Display,
{
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl<B, X> TypedInt<B, X>
where
    B: Copy,
{
    pub fn new(inner: B) -> Self {
        Self::from(inner)
    }
    pub fn into_inner(self) -> B {
        self.0
    }
    pub fn inner(&self) -> &B {
        &self.0
    }
}

/// Position of a typed index in its table.
pub trait AsIndex {
    fn index(&self) -> usize;
}

macro_rules! as_index_impl {
    ($($base:ty),*) => {
        $(
            impl<X> AsIndex for TypedInt<$base, X> {
                fn index(&self) -> usize {
                    self.0 as usize
                }
            }
        )*
    };
}

as_index_impl!(u16, u32);

#[macro_export]
macro_rules! typed_int {
    ($name:ident, $tag:ident, $base:ty) => {
        #[derive(Debug, Eq, Ord, PartialOrd, PartialEq, Hash)]
        pub struct $tag(usize);
        pub type $name = TypedInt<$base, $tag>;
    };
}
