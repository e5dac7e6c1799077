pub mod swlog;
