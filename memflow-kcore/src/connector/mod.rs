/*!
Module containing the image side of the translator.

It contains the parser for the kernel core image header, a seekable file i/o backend
that resolves physical addresses through the segment map, and the argument wrapper used
to describe how an image should be opened.
*/

pub mod args;
#[doc(hidden)]
pub use args::ImageArgs;

pub mod kcore;
#[doc(hidden)]
pub use kcore::ImageHeader;

pub mod fileio;
#[doc(hidden)]
pub use fileio::ImageMemory;
