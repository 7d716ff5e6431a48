mod decisions;
mod remote;
