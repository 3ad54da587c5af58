// CDP Domain type definitions
// Contains the domains used by the profiling coordinator

pub mod heap_profiler;
pub mod profiler;
pub mod runtime;
