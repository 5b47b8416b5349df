pub mod compilation;
