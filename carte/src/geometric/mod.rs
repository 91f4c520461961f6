pub mod basemap;
pub mod canvas;
pub mod frame;
pub mod marker;
