//! A minimal synchronous debug REPL: step, continue, inspect registers/memory/CSRs, and manage
//! breakpoints, all driven from stdin.

use rv32sim_core::core::csr;
use rv32sim_core::registers::Specifier;
use rv32sim_core::{Core, StepResult};
use std::io::{self, Write};

/// Runs the interactive REPL to completion (`quit` or guest exit).
pub fn run(core: &mut Core) {
    println!("rv32sim debug REPL. Type `help` for a command list.");
    loop {
        print!("(rv32sim) ");
        let _ = io::stdout().flush();

        let mut line = String::new();
        if io::stdin().read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else { continue };

        match command {
            "help" | "h" => print_help(),
            "quit" | "q" => break,
            "step" | "s" => {
                let count = words.next().and_then(|w| w.parse().ok()).unwrap_or(1u32);
                for _ in 0..count {
                    if step_once(core) {
                        break;
                    }
                }
            }
            "continue" | "c" => {
                core.clear_halt();
                loop {
                    if step_once(core) {
                        break;
                    }
                    if core.has_breakpoint(core.pc()) {
                        println!("breakpoint hit at {:#010x}", core.pc());
                        break;
                    }
                    if core.take_interrupted() {
                        println!("interrupted");
                        break;
                    }
                }
            }
            "break" | "b" => match words.next().and_then(parse_hex) {
                Some(addr) => {
                    core.insert_breakpoint(addr);
                    println!("breakpoint set at {addr:#010x}");
                }
                None => println!("usage: break <hex address>"),
            },
            "delete" | "d" => match words.next().and_then(parse_hex) {
                Some(addr) => {
                    core.remove_breakpoint(addr);
                    println!("breakpoint cleared at {addr:#010x}");
                }
                None => println!("usage: delete <hex address>"),
            },
            "regs" | "r" => print_registers(core),
            "mem" | "x" => {
                let addr = words.next().and_then(parse_hex);
                let count = words.next().and_then(|w| w.parse().ok()).unwrap_or(1usize);
                match addr {
                    Some(addr) => print_memory(core, addr, count),
                    None => println!("usage: mem <hex address> [word count]"),
                }
            }
            "csr" => match words.next().and_then(parse_hex) {
                Some(number) => match core.read_csr_debug(number as csr::CsrSpecifier) {
                    Some(value) => println!("{number:#06x} = {value:#010x}"),
                    None => println!("unimplemented CSR {number:#06x}"),
                },
                None => println!("usage: csr <hex number>"),
            },
            other => println!("unknown command: {other} (try `help`)"),
        }
    }
}

/// Steps the core once, printing the exit status if the guest just terminated.
/// Returns `true` if the guest has exited.
fn step_once(core: &mut Core) -> bool {
    match core.step() {
        StepResult::Continue => false,
        StepResult::Exited(status) => {
            println!("guest exited with status {status}");
            true
        }
    }
}

fn parse_hex(word: &str) -> Option<u32> {
    u32::from_str_radix(word.trim_start_matches("0x"), 16).ok()
}

fn print_registers(core: &Core) {
    println!("pc  = {:#010x}", core.pc());
    for i in 0..32u8 {
        let specifier = Specifier::from_u5(i);
        print!("x{:<2}= {:#010x}  ", i, core.read_register(specifier));
        if i % 4 == 3 {
            println!();
        }
    }
    println!("cycle = {}  instret = {}", core.cycle(), core.instret());
}

fn print_memory(core: &Core, base: u32, word_count: usize) {
    for i in 0..word_count {
        let address = base.wrapping_add((i * 4) as u32);
        let mut buf = [0u8; 4];
        match core.read_memory_debug(address, &mut buf) {
            Ok(()) => println!("{:#010x}: {:#010x}", address, u32::from_le_bytes(buf)),
            Err(error) => {
                println!("{address:#010x}: <{error}>");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::parse_hex;

    #[test]
    fn parses_with_and_without_0x_prefix() {
        assert_eq!(parse_hex("0x1000"), Some(0x1000));
        assert_eq!(parse_hex("1000"), Some(0x1000));
        assert_eq!(parse_hex("ff"), Some(0xff));
    }

    #[test]
    fn rejects_non_hex_input() {
        assert_eq!(parse_hex("not-an-address"), None);
        assert_eq!(parse_hex(""), None);
    }
}

fn print_help() {
    println!(
        "commands:\n\
         \u{20}  step [n]          execute n instructions (default 1)\n\
         \u{20}  continue          run until a breakpoint, trap-free exit, or Ctrl-C\n\
         \u{20}  break <addr>      set a breakpoint at a hex address\n\
         \u{20}  delete <addr>     clear a breakpoint\n\
         \u{20}  regs              dump the register file\n\
         \u{20}  mem <addr> [n]    dump n words of memory starting at addr\n\
         \u{20}  csr <num>         read a CSR by its hex number\n\
         \u{20}  quit              leave the REPL"
    );
}
