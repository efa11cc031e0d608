/*!
Module with basic types used in memflow-kcore.

This module contains the address type shared by virtual and physical addresses
and it exposes different size helpers.
*/

pub mod address;
#[doc(hidden)]
pub use address::Address;

pub mod size;
