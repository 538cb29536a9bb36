use crate::component_storage::{AnyComponentStore, ComponentStore};
use crate::component_types::ComponentTypes;
use crate::{Component, ComponentTypeId, EntityId};
use smallvec::SmallVec;

pub const MAX_QUERY_TYPES_ON_STACK: usize = 8;

pub type QueryTypeIds = SmallVec<[ComponentTypeId; MAX_QUERY_TYPES_ON_STACK]>;

/// A combination of component types that can be iterated with
/// [`Domain::for_each`](crate::Domain::for_each).
///
/// Implemented for tuples of up to eight component types.
pub trait Query {
    /// Mutable references to one component of each type.
    type Item<'a>;

    /// Ids of the queried types, in tuple order.
    /// `None` if one of them has never been registered.
    fn type_ids(types: &ComponentTypes) -> Option<QueryTypeIds>;

    /// Collects the components of `entities`, keeping their order.
    ///
    /// `stores` are the storages of the queried types in tuple order.
    /// Entities missing one of the components are skipped.
    fn fetch<'a>(
        stores: Vec<&'a mut Box<dyn AnyComponentStore>>,
        entities: &[EntityId],
    ) -> Option<Vec<(EntityId, Self::Item<'a>)>>;
}

macro_rules! impl_query {
    ($($ty: ident),+) => {
        impl<$($ty: Component),+> Query for ($($ty,)+) {
            type Item<'a> = ($(&'a mut $ty,)+);

            fn type_ids(types: &ComponentTypes) -> Option<QueryTypeIds> {
                Some(smallvec::smallvec![$(types.get::<$ty>()?),+])
            }

            #[allow(non_snake_case)]
            fn fetch<'a>(
                stores: Vec<&'a mut Box<dyn AnyComponentStore>>,
                entities: &[EntityId],
            ) -> Option<Vec<(EntityId, Self::Item<'a>)>> {
                let mut stores = stores.into_iter();
                $(
                    let $ty: &'a mut ComponentStore<$ty> = stores.next()?.as_any_mut().downcast_mut()?;
                    let mut $ty = $ty.get_many_mut(entities).into_iter();
                )+

                Some(
                    entities
                        .iter()
                        .filter_map(|entity| {
                            // Advance every column before skipping, so they stay aligned.
                            $(let $ty = $ty.next()?;)+
                            Some((*entity, ($($ty?,)+)))
                        })
                        .collect(),
                )
            }
        }
    };
}

impl_query!(A);
impl_query!(A, B);
impl_query!(A, B, C);
impl_query!(A, B, C, D);
impl_query!(A, B, C, D, E);
impl_query!(A, B, C, D, E, F);
impl_query!(A, B, C, D, E, F, G);
impl_query!(A, B, C, D, E, F, G, H);
