pub mod tile_source;
