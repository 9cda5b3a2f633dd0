mod auto_save;
mod cli;
mod persistence;
