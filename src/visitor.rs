use crate::bitcode::{BitcodeElement, Block, Record, Signature};
use crate::read::{self, BitStreamReader};

/// A visitor which receives callbacks while reading a bitstream.
///
/// Records are handed to the visitor together with the id of the block that
/// encloses them, so an implementation dispatches on the block kind.
pub trait BitStreamVisitor {
    /// Errors raised by the visitor itself. Decoder errors are converted into
    /// this type so a single `Result` flows out of the read.
    type Error: From<read::Error>;

    /// Validate a bitstream's signature or "magic number".
    fn validate(&self, signature: &Signature) -> bool {
        signature.is_llvm_ir()
    }
    /// Called when a new block is encountered. Return `true` to enter the block
    /// and read its contents, or `false` to skip it.
    fn should_enter_block(&mut self, id: u64) -> bool;
    /// Called when a block is exited.
    fn did_exit_block(&mut self, id: u64) -> Result<(), Self::Error>;
    /// Called whenever a record is encountered.
    fn visit(&mut self, block_id: u64, record: Record) -> Result<(), Self::Error>;
}

/// A basic visitor that collects all the blocks and records in a stream.
pub struct CollectingVisitor {
    stack: Vec<(u64, Vec<BitcodeElement>)>,
}

impl CollectingVisitor {
    pub fn new() -> Self {
        Self {
            stack: vec![(BitStreamReader::TOP_LEVEL_BLOCK_ID, Vec::new())],
        }
    }

    pub fn finalize_top_level_elements(mut self) -> Vec<BitcodeElement> {
        // The reader only returns successfully once every block is closed.
        debug_assert_eq!(self.stack.len(), 1);
        self.stack.pop().map(|(_, elements)| elements).unwrap_or_default()
    }
}

impl Default for CollectingVisitor {
    fn default() -> Self {
        Self::new()
    }
}

impl BitStreamVisitor for CollectingVisitor {
    type Error = read::Error;

    fn validate(&self, _signature: &Signature) -> bool {
        true
    }

    fn should_enter_block(&mut self, id: u64) -> bool {
        self.stack.push((id, Vec::new()));
        true
    }

    fn did_exit_block(&mut self, _id: u64) -> Result<(), Self::Error> {
        if let Some((id, elements)) = self.stack.pop() {
            let block = Block { id, elements };
            if let Some((_, parent)) = self.stack.last_mut() {
                parent.push(BitcodeElement::Block(block));
            }
        }
        Ok(())
    }

    fn visit(&mut self, _block_id: u64, record: Record) -> Result<(), Self::Error> {
        if let Some((_, elements)) = self.stack.last_mut() {
            elements.push(BitcodeElement::Record(record));
        }
        Ok(())
    }
}
