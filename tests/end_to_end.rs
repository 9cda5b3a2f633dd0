mod canopy_test;
mod tests;
