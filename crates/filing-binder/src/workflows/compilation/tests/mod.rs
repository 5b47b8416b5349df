mod common;
mod sections;
