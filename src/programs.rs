//! Demonstration programs
//!
//! Each one takes its input from a fixed table, indexed by how many copies
//! of it have started so far, prints its result and exits.

use core::fmt::Write;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::usercall::{self, uprintln, Line, Program};

const COLLATZ_INPUTS: [i64; 10] = [7; 10];
const BINARY_SEARCH_INPUTS: [i64; 10] = [110; 10];
const LINEAR_SEARCH_INPUTS: [i64; 10] = [175, 110, 80, 175, 175, 175, 175, 175, 175, 175];
const LONG_RUNNING_INPUTS: [i64; 10] = [10, 20, 30, 40, 50, 60, 70, 80, 90, 10];

const SEARCH_ARRAY: [i64; 10] = [10, 20, 80, 30, 60, 50, 110, 100, 130, 170];

static COLLATZ_RUNS: AtomicUsize = AtomicUsize::new(0);
static BINARY_SEARCH_RUNS: AtomicUsize = AtomicUsize::new(0);
static LINEAR_SEARCH_RUNS: AtomicUsize = AtomicUsize::new(0);
static LONG_RUNNING_RUNS: AtomicUsize = AtomicUsize::new(0);

/// Every program, in the order the random scenarios index them.
pub const ALL: [Program; 4] = [collatz, linear_search, binary_search, long_running];

fn next_input(inputs: &[i64; 10], runs: &AtomicUsize) -> i64 {
    let n = runs.fetch_add(1, Ordering::Relaxed);
    inputs[n % inputs.len()]
}

/// Slow the output down enough to watch the scheduler interleave tasks.
fn delay() {
    for _ in 0..5_000_000 {
        core::hint::spin_loop();
    }
}

pub extern "C" fn collatz() -> ! {
    let input = next_input(&COLLATZ_INPUTS, &COLLATZ_RUNS);

    for start in (2..=input).rev() {
        let mut line = Line::new();
        let _ = write!(line, "{}:", start);
        let mut n = start;
        while n > 1 {
            n = if n % 2 == 0 { n / 2 } else { 3 * n + 1 };
            let _ = write!(line, " {}", n);
        }
        let _ = line.write_char('\n');
        line.flush();
        delay();
    }

    usercall::exit()
}

pub extern "C" fn long_running() -> ! {
    let n = 10;
    let mut result = next_input(&LONG_RUNNING_INPUTS, &LONG_RUNNING_RUNS);
    for i in 0..n {
        for j in 0..n {
            result += i * j;
        }
    }
    uprintln!("Result: {}", result);
    delay();
    usercall::exit()
}

pub extern "C" fn binary_search() -> ! {
    let x = next_input(&BINARY_SEARCH_INPUTS, &BINARY_SEARCH_RUNS);
    let mut arr = SEARCH_ARRAY;
    insertion_sort(&mut arr);

    let mut line = Line::new();
    let _ = line.write_str("Sorted Array to Search:");
    for item in arr {
        let _ = write!(line, " {}", item);
    }
    let _ = line.write_char('\n');
    line.flush();
    delay();

    let found = arr.binary_search(&x).map_or(-1, |idx| idx as i64);
    uprintln!("Result: {}", found);
    delay();
    usercall::exit()
}

pub extern "C" fn linear_search() -> ! {
    let x = next_input(&LINEAR_SEARCH_INPUTS, &LINEAR_SEARCH_RUNS);
    let found = SEARCH_ARRAY
        .iter()
        .position(|&item| item == x)
        .map_or(-1, |idx| idx as i64);
    uprintln!("Result: {}", found);
    delay();
    usercall::exit()
}

fn insertion_sort(arr: &mut [i64]) {
    for i in 1..arr.len() {
        let mut j = i;
        while j > 0 && arr[j] < arr[j - 1] {
            arr.swap(j, j - 1);
            j -= 1;
        }
    }
}
