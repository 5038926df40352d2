//! Bundles: groups of components spawned together.
//!
//! A bundle is a tuple of components, `()` included. `(Position,)` spawns a
//! single component.

use crate::archetype::Archetype;
use crate::component::{Component, ComponentId, ComponentRegistry};

/// A statically typed group of components.
pub trait Bundle: Send + Sync + 'static {
    /// Registers every member type, appending ids in member order.
    fn register(registry: &mut ComponentRegistry, ids: &mut Vec<ComponentId>);

    /// Pushes every member into `archetype`, consuming ids in member order.
    ///
    /// The archetype's signature must contain every id.
    fn write(self, archetype: &mut Archetype, ids: &mut std::slice::Iter<'_, ComponentId>);
}

macro_rules! impl_bundle_tuple {
    ($($name:ident),*) => {
        impl<$($name: Component),*> Bundle for ($($name,)*) {
            #[allow(unused_variables)]
            fn register(registry: &mut ComponentRegistry, ids: &mut Vec<ComponentId>) {
                $(ids.push(registry.register::<$name>());)*
            }

            #[allow(non_snake_case, unused_variables)]
            fn write(self, archetype: &mut Archetype, ids: &mut std::slice::Iter<'_, ComponentId>) {
                let ($($name,)*) = self;
                $(
                    let id = *ids.next().expect("one id per bundle member");
                    archetype.push_component(id, $name);
                )*
            }
        }
    };
}

impl_bundle_tuple!();
impl_bundle_tuple!(A);
impl_bundle_tuple!(A, B);
impl_bundle_tuple!(A, B, C);
impl_bundle_tuple!(A, B, C, D);
impl_bundle_tuple!(A, B, C, D, E);
impl_bundle_tuple!(A, B, C, D, E, F);
impl_bundle_tuple!(A, B, C, D, E, F, G);
impl_bundle_tuple!(A, B, C, D, E, F, G, H);
