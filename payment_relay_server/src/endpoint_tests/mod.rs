mod helpers;
mod mocks;
mod payments;
mod summary;
mod relay_flow;
