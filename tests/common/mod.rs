#![allow(dead_code)]

pub mod collection;
pub mod command;
