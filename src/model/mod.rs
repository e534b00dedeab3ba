//! Message types: the parsed-message contract, default parsed messages, and raw blocks.

pub mod mail;
