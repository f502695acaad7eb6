pub mod canvas;
pub mod collab;
pub mod graph_utils;
pub mod gui;
pub mod history;
pub mod persistence;
pub mod workspace;
