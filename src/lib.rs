mod asm;
pub mod isa;
mod object;
pub mod pipeline;
mod utils;

pub use asm::assemble;
pub use asm::AssembleOption;
pub use object::Object;
pub use pipeline::{Simulator, Stats};
pub use utils::{mem_dump, reg_dump};

#[cfg(test)]
mod tests {
    use crate::{assemble, AssembleOption, Simulator};

    #[test]
    fn test_assemble() {
        let r = assemble(crate::asm::tests::SUM_DEMO, AssembleOption::default()).unwrap();
        dbg!(&r.source);
        eprintln!("{}", r);
    }

    #[test]
    fn test_run_demo() {
        let r = assemble(crate::asm::tests::SUM_DEMO, AssembleOption::default()).unwrap();
        let mut pipe = Simulator::new(&r.words, false);
        while !pipe.is_terminate() {
            pipe.step();
        }
        // SW/LW round trip through data memory, then ALU chain
        assert_eq!(pipe.registers()[4], 7);
        assert_eq!(pipe.registers()[5], 35);
        assert_eq!(pipe.registers()[6], 42);
        assert_eq!(pipe.mem()[1024], 7);
        assert_eq!(pipe.mem()[1025], 35);
    }
}
