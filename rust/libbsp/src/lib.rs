pub mod bsp;
pub mod contents;
pub mod io;
pub mod types;

extern crate bsp_derive;
extern crate bytes;
#[macro_use]
extern crate bitflags;
#[macro_use]
extern crate typed_ints;
