//! Typed command families
//!
//! Each module adds methods to [`NamespacedStore`](crate::NamespacedStore)
//! for one Redis data type. Keys are namespaced and replies decoded; a
//! command skipped because the store is read-only decodes as the nil
//! reading (`None`, `0`, `false`, empty collection).

mod hashes;
mod keys;
mod lists;
mod sets;
mod sorted_sets;
mod strings;

pub use strings::{SetCondition, SetOptions};

use keyspace_core::{Arg, Command};

/// Append every item of `values` as an argument
fn with_all<V: Into<Arg>>(mut command: Command, values: impl IntoIterator<Item = V>) -> Command {
    command
        .args_mut()
        .extend(values.into_iter().map(Into::into));
    command
}
