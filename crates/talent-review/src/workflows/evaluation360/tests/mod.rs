mod common;
mod cycle;
mod routing;
