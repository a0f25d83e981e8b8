//! This is a small crate for programs that carry another program inside them. Register
//! the bytes of an executable and of whatever files it needs (shared libraries, data),
//! unpack them to a directory of your choosing, and run the executable as a child process
//! with the working directory, environment and arguments you configure. Use cases for
//! this may include:
//!
//! * Shipping a prebuilt tool together with the shared libraries it links against, as a
//!   single host binary
//! * Wrapping a program that is a pain to install so that users get one file to run
//!
//! # Example
//!
//! The following example unpacks a library and a program embedded with `include_bytes!()`
//! into `unpacked/` and runs the program from `unpacked/bin`, pointing the dynamic loader
//! at the unpacked library.
//!
//! ```no_run
//! use unpack_exec::Bundle;
//!
//! # const LIB: &[u8] = b"";
//! # const RUN: &[u8] = b"";
//! // const LIB: &[u8] = include_bytes!("libvalue.so");
//! // const RUN: &[u8] = include_bytes!("main.run");
//!
//! let mut bundle = Bundle::new();
//! bundle
//!     .unpack_root("unpacked")
//!     .add_dependency("lib/libvalue.so", LIB)
//!     .add_executable("bin/main.run", RUN)
//!     .work_dir("unpacked/bin")
//!     .env("LD_LIBRARY_PATH=../lib");
//!
//! // Write everything to disk, creating directories as needed
//! bundle.unpack().unwrap();
//!
//! // Start the program and block until it exits
//! let code = bundle.run().unwrap();
//! println!("program exit code: {}", code);
//! ```
//!
//! The crate logs through [`tracing`] and never installs a subscriber itself; errors are
//! always returned to the caller as [`Error`].

mod bundle;
mod child;
mod command_env;
mod error;
mod executable;
mod process;
mod sys;
mod unpack;

pub use bundle::{Bundle, FileKind, ManagedFile};
pub use child::Child;
pub use error::{Error, ErrorKind, Result, EXIT_CODE_SENTINEL};
pub use process::ExitStatus;
